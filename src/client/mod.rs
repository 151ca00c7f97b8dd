pub mod prediction;

pub use prediction::{decode_response, PredictionClient};

use futures_util::future::BoxFuture;

use crate::error::Result;
use crate::types::{PredictionRequest, PredictionResponse};

/// Anything that can answer a prediction request
pub trait PredictionSource: Send + Sync {
    fn fetch<'a>(&'a self, request: &'a PredictionRequest) -> BoxFuture<'a, Result<PredictionResponse>>;
}
