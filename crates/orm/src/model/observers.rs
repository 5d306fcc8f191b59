//! Model lifecycle observers
//!
//! Observers hook into the persistence lifecycle. The `-ing` hooks run
//! before the statement and may veto it by returning `Ok(false)`; the
//! `-ed` hooks run after it succeeds.

use async_trait::async_trait;

use super::Model;
use crate::error::ModelResult;

#[async_trait]
pub trait ModelObserver: Send + Sync {
    async fn saving(&self, _model: &mut Model) -> ModelResult<bool> {
        Ok(true)
    }

    async fn creating(&self, _model: &mut Model) -> ModelResult<bool> {
        Ok(true)
    }

    async fn updating(&self, _model: &mut Model) -> ModelResult<bool> {
        Ok(true)
    }

    async fn deleting(&self, _model: &mut Model) -> ModelResult<bool> {
        Ok(true)
    }

    async fn restoring(&self, _model: &mut Model) -> ModelResult<bool> {
        Ok(true)
    }

    async fn saved(&self, _model: &mut Model) -> ModelResult<()> {
        Ok(())
    }

    async fn created(&self, _model: &mut Model) -> ModelResult<()> {
        Ok(())
    }

    async fn updated(&self, _model: &mut Model) -> ModelResult<()> {
        Ok(())
    }

    async fn deleted(&self, _model: &mut Model) -> ModelResult<()> {
        Ok(())
    }

    async fn restored(&self, _model: &mut Model) -> ModelResult<()> {
        Ok(())
    }
}
