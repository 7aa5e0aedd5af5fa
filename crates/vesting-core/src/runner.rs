//! Sequential step execution with cancellation.

use crate::error::FlowError;
use crate::tx::ConfirmedTx;
use serde::Serialize;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// A completed step of a flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
	pub step: String,
	pub tx_hash: String,
	pub height: u64,
	pub gas_used: u64,
}

impl From<&ConfirmedTx> for StepReport {
	fn from(tx: &ConfirmedTx) -> Self {
		Self {
			step: tx.step.clone(),
			tx_hash: tx.hash.to_string(),
			height: tx.height,
			gas_used: tx.gas_used,
		}
	}
}

/// Summary of a flow that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowReport {
	pub flow: String,
	pub steps: Vec<StepReport>,
}

/// Runs the steps of one flow in order.
///
/// A step starts only after the previous one returned `Ok`. The first error
/// ends the flow, and cancellation is observed both before a step starts and
/// while it is in flight.
pub struct StepRunner {
	flow: String,
	cancel: CancellationToken,
	completed: Vec<StepReport>,
}

impl StepRunner {
	pub fn new(flow: &str, cancel: CancellationToken) -> Self {
		info!(flow, "Starting flow");
		Self {
			flow: flow.to_string(),
			cancel,
			completed: Vec::new(),
		}
	}

	/// Runs a step that submits one transaction.
	pub async fn step<F>(&mut self, name: &str, fut: F) -> Result<ConfirmedTx, FlowError>
	where
		F: Future<Output = Result<ConfirmedTx, FlowError>>,
	{
		let tx = self.run(name, fut).await?;
		info!(
			flow = %self.flow,
			step = name,
			tx_hash = %tx.hash,
			height = tx.height,
			"Step confirmed"
		);
		self.completed.push(StepReport::from(&tx));
		Ok(tx)
	}

	/// Runs a step that does not produce a transaction.
	pub async fn run<T, F>(&mut self, name: &str, fut: F) -> Result<T, FlowError>
	where
		F: Future<Output = Result<T, FlowError>>,
	{
		if self.cancel.is_cancelled() {
			return Err(self.halt(FlowError::Cancelled {
				step: name.to_string(),
			}));
		}

		let result = tokio::select! {
			biased;
			_ = self.cancel.cancelled() => Err(FlowError::Cancelled { step: name.to_string() }),
			result = fut => result,
		};

		result.map_err(|e| self.halt(e))
	}

	fn halt(&self, e: FlowError) -> FlowError {
		error!(
			flow = %self.flow,
			step = e.step(),
			completed = self.completed.len(),
			"Flow halted: {}",
			e
		);
		e
	}

	pub fn completed(&self) -> &[StepReport] {
		&self.completed
	}

	pub fn finish(self) -> FlowReport {
		info!(flow = %self.flow, steps = self.completed.len(), "Flow completed");
		FlowReport {
			flow: self.flow,
			steps: self.completed,
		}
	}
}
