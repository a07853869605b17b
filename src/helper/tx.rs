//! Transaction and savepoint operations.
//!
//! `mark` creates a savepoint and refuses a name that is already live. `save`
//! checkpoints: it behaves like `mark` for a new name and moves an existing savepoint
//! (discarding the ones created after it) to the current point. `discard` releases a
//! savepoint together with every newer one.

use tracing::{debug, warn};

use super::DataHelper;
use crate::error::DataHelperError;
use crate::transaction::{TokenRole, TokenStatus};
use crate::translation::validate_identifier;

impl DataHelper {
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.tx.is_active()
    }

    /// Live savepoints, oldest first.
    #[must_use]
    pub fn savepoints(&self) -> &[String] {
        self.tx.savepoints()
    }

    /// Begin a transaction. Beginning while one is active is a no-op.
    ///
    /// # Errors
    /// `NoConnection` before `open`, otherwise the driver's error.
    pub async fn begin(&mut self) -> Result<(), DataHelperError> {
        self.ensure_open()?;
        if self.tx.is_active() {
            debug!("begin: transaction already active");
            return Ok(());
        }
        self.driver.begin().await?;
        let tx_id = self.tx.start();
        debug!(tx_id, "transaction started");
        Ok(())
    }

    /// Begin a transaction whose rollback the caller may defer, returning its token.
    ///
    /// With no transaction active the token owns a new one; otherwise it joins the
    /// active transaction and committing it only retires the token. Rolling back with
    /// any live token rolls back the whole transaction, and rolling back with the token
    /// of a transaction that has already ended does nothing, so a scope can always
    /// finish with a deferred `rollback(Some(&token))`.
    /// ```rust,no_run
    /// # use datahelper_lite::prelude::*;
    /// # async fn transfer(helper: &mut DataHelper) -> Result<(), DataHelperError> {
    /// let token = helper.begin_dr().await?;
    /// let outcome = async {
    ///     helper.exec("update {accounts} set balance = balance - ? where id = ?", &[10.into(), 1.into()]).await?;
    ///     helper.exec("update {accounts} set balance = balance + ? where id = ?", &[10.into(), 2.into()]).await?;
    ///     helper.commit(Some(&token)).await
    /// }
    /// .await;
    /// helper.rollback(Some(&token)).await?;
    /// outcome
    /// # }
    /// ```
    ///
    /// # Errors
    /// `NoConnection` before `open`, otherwise the driver's error.
    pub async fn begin_dr(&mut self) -> Result<String, DataHelperError> {
        self.ensure_open()?;
        let role = if self.tx.is_active() {
            TokenRole::Joined
        } else {
            self.driver.begin().await?;
            self.tx.start();
            TokenRole::Owner
        };
        let token = self.tx.mint_token(role).ok_or(DataHelperError::NoTransaction)?;
        debug!(token = %token, ?role, "deferred-rollback transaction started");
        Ok(token)
    }

    /// Commit the current transaction, or resolve `token` first.
    ///
    /// The token stays resolvable afterwards, so the scope's deferred
    /// `rollback(Some(token))` completes as a no-op and retires it. A token left
    /// unresolved is forgotten once the transaction after the next one begins.
    ///
    /// # Errors
    /// `NoTransaction` with nothing to commit (including a token whose transaction has
    /// already ended), `UnknownTransactionToken` for a token this helper never minted,
    /// otherwise the driver's error.
    pub async fn commit(&mut self, token: Option<&str>) -> Result<(), DataHelperError> {
        let Some(token) = token else {
            return self.commit_current().await;
        };
        match self.tx.token_status(token) {
            TokenStatus::Unknown => Err(DataHelperError::UnknownTransactionToken(token.to_owned())),
            TokenStatus::Finished => {
                warn!(token, "commit with a token whose transaction already ended");
                Err(DataHelperError::NoTransaction)
            }
            TokenStatus::Live(TokenRole::Joined) => {
                self.tx.detach(token);
                debug!(token, "joined token released, outer transaction left open");
                Ok(())
            }
            TokenStatus::Live(TokenRole::Owner) => self.commit_current().await,
        }
    }

    async fn commit_current(&mut self) -> Result<(), DataHelperError> {
        self.ensure_open()?;
        if !self.tx.is_active() {
            return Err(DataHelperError::NoTransaction);
        }
        self.driver.commit().await?;
        self.tx.finish();
        debug!("transaction committed");
        Ok(())
    }

    /// Roll back the current transaction, or resolve `token` first.
    ///
    /// # Errors
    /// `NoTransaction` when called without a token outside a transaction,
    /// `UnknownTransactionToken` for a token this helper never minted, otherwise the
    /// driver's error.
    pub async fn rollback(&mut self, token: Option<&str>) -> Result<(), DataHelperError> {
        let Some(token) = token else {
            return self.rollback_current().await;
        };
        match self.tx.token_status(token) {
            TokenStatus::Unknown => Err(DataHelperError::UnknownTransactionToken(token.to_owned())),
            TokenStatus::Finished => {
                self.tx.retire(token);
                warn!(token, "deferred rollback after the transaction ended, nothing to do");
                Ok(())
            }
            TokenStatus::Live(_) => {
                self.rollback_current().await?;
                self.tx.retire(token);
                Ok(())
            }
        }
    }

    async fn rollback_current(&mut self) -> Result<(), DataHelperError> {
        self.ensure_open()?;
        if !self.tx.is_active() {
            return Err(DataHelperError::NoTransaction);
        }
        let depth = self.tx.depth();
        self.driver.rollback().await?;
        self.tx.finish();
        debug!(depth, "transaction rolled back");
        Ok(())
    }

    fn check_savepoint_target<'a>(&self, name: &'a str) -> Result<&'a str, DataHelperError> {
        self.ensure_open()?;
        if !self.tx.is_active() {
            return Err(DataHelperError::NoTransaction);
        }
        validate_identifier(name)
    }

    /// Create savepoint `name` in the current transaction.
    ///
    /// # Errors
    /// `NoTransaction` outside a transaction, `InvalidIdentifier` for a malformed name,
    /// `DuplicateSavepoint` when `name` is already live, otherwise the driver's error.
    pub async fn mark(&mut self, name: &str) -> Result<(), DataHelperError> {
        let name = self.check_savepoint_target(name)?;
        if self.tx.savepoint_position(name).is_some() {
            return Err(DataHelperError::DuplicateSavepoint(name.to_owned()));
        }
        self.driver.savepoint(name).await?;
        self.tx.push_savepoint(name);
        debug!(savepoint = name, depth = self.tx.depth(), "savepoint marked");
        Ok(())
    }

    /// Checkpoint `name`: create it, or move an existing one to the current point.
    ///
    /// # Errors
    /// `NoTransaction` outside a transaction, `InvalidIdentifier` for a malformed name,
    /// otherwise the driver's error.
    pub async fn save(&mut self, name: &str) -> Result<(), DataHelperError> {
        let name = self.check_savepoint_target(name)?;
        if let Some(pos) = self.tx.savepoint_position(name) {
            self.driver.release_savepoint(name).await?;
            self.tx.truncate_savepoints(pos);
        }
        self.driver.savepoint(name).await?;
        self.tx.push_savepoint(name);
        debug!(savepoint = name, depth = self.tx.depth(), "savepoint saved");
        Ok(())
    }

    /// Release savepoint `name` and every savepoint created after it.
    ///
    /// # Errors
    /// `NoTransaction` outside a transaction, `InvalidIdentifier` for a malformed name,
    /// `SavepointNotFound` when `name` is not live, otherwise the driver's error.
    pub async fn discard(&mut self, name: &str) -> Result<(), DataHelperError> {
        let name = self.check_savepoint_target(name)?;
        let pos = self
            .tx
            .savepoint_position(name)
            .ok_or_else(|| DataHelperError::SavepointNotFound(name.to_owned()))?;
        self.driver.release_savepoint(name).await?;
        self.tx.truncate_savepoints(pos);
        debug!(savepoint = name, depth = self.tx.depth(), "savepoint discarded");
        Ok(())
    }

    /// Undo the work done since savepoint `name`. The savepoint stays live; newer ones
    /// are dropped.
    ///
    /// # Errors
    /// As [`DataHelper::discard`].
    pub async fn rollback_to(&mut self, name: &str) -> Result<(), DataHelperError> {
        let name = self.check_savepoint_target(name)?;
        let pos = self
            .tx
            .savepoint_position(name)
            .ok_or_else(|| DataHelperError::SavepointNotFound(name.to_owned()))?;
        self.driver.rollback_to_savepoint(name).await?;
        self.tx.truncate_savepoints(pos + 1);
        debug!(savepoint = name, depth = self.tx.depth(), "rolled back to savepoint");
        Ok(())
    }
}
