use core_types::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Not enough cash available to execute trade. Required: {required}, Available: {available}")]
    InsufficientCash { required: String, available: String },

    #[error("Invalid order quantity for closing position. Requested: {requested}, Available: {available}")]
    InvalidClosingQuantity { requested: String, available: String },

    #[error("Invalid execution for {symbol}: {reason}")]
    InvalidExecution { symbol: String, reason: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}
