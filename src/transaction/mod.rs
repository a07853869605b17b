//! Transaction and savepoint bookkeeping for one helper instance.
//!
//! [`TxState`] performs no I/O. The helper issues the driver statement first and
//! records the transition here only once the driver accepted it, so the state never
//! runs ahead of the connection.
//!
//! Deferred-rollback tokens are kept for the open transaction and for the one
//! that finished just before it. Starting a transaction forgets tokens of every
//! earlier one, so a late `rollback(Some(token))` resolves as a no-op for one
//! transaction back and as unknown after that. The table never holds more than
//! two transactions' worth of tokens.

use std::collections::HashMap;

/// Whether a deferred-rollback token started its transaction or joined one already open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRole {
    Owner,
    Joined,
}

/// What a deferred-rollback token refers to right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenStatus {
    /// Minted for the transaction that is still open.
    Live(TokenRole),
    /// Minted for a transaction that has since committed or rolled back.
    Finished,
    /// Never minted by this helper, or already retired.
    Unknown,
}

#[derive(Debug, Clone, Copy)]
struct TokenEntry {
    tx_id: u64,
    role: TokenRole,
    released: bool,
}

#[derive(Debug)]
struct ActiveTx {
    id: u64,
    savepoints: Vec<String>,
}

#[derive(Debug, Default)]
pub(crate) struct TxState {
    active: Option<ActiveTx>,
    next_id: u64,
    tokens: HashMap<String, TokenEntry>,
}

fn generate_token() -> String {
    format!("tx_{}", uuid::Uuid::new_v4().simple())
}

impl TxState {
    pub(crate) fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Live savepoints, oldest first.
    pub(crate) fn savepoints(&self) -> &[String] {
        match &self.active {
            Some(tx) => &tx.savepoints,
            None => &[],
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.savepoints().len()
    }

    /// Record a transaction the driver has just begun.
    pub(crate) fn start(&mut self) -> u64 {
        debug_assert!(self.active.is_none(), "transaction already active");
        let previous = self.next_id;
        self.tokens.retain(|_, entry| entry.tx_id == previous);
        self.next_id += 1;
        self.active = Some(ActiveTx {
            id: self.next_id,
            savepoints: Vec::new(),
        });
        self.next_id
    }

    /// Record that the current transaction committed or rolled back.
    ///
    /// Tokens minted for it stay resolvable as finished until retired or until the
    /// transaction after next starts.
    pub(crate) fn finish(&mut self) {
        self.active = None;
    }

    /// Mint a token bound to the current transaction; `None` when none is active.
    pub(crate) fn mint_token(&mut self, role: TokenRole) -> Option<String> {
        let tx_id = self.active.as_ref()?.id;
        let mut token = generate_token();
        while self.tokens.contains_key(&token) {
            token = generate_token();
        }
        self.tokens.insert(
            token.clone(),
            TokenEntry {
                tx_id,
                role,
                released: false,
            },
        );
        Some(token)
    }

    pub(crate) fn token_status(&self, token: &str) -> TokenStatus {
        match self.tokens.get(token) {
            None => TokenStatus::Unknown,
            Some(entry) => match &self.active {
                Some(tx) if tx.id == entry.tx_id && !entry.released => {
                    TokenStatus::Live(entry.role)
                }
                _ => TokenStatus::Finished,
            },
        }
    }

    /// Unbind a joined token from the still-open transaction; it now resolves as finished.
    pub(crate) fn detach(&mut self, token: &str) {
        if let Some(entry) = self.tokens.get_mut(token) {
            entry.released = true;
        }
    }

    pub(crate) fn retire(&mut self, token: &str) {
        self.tokens.remove(token);
    }

    #[cfg(test)]
    pub(crate) fn outstanding_tokens(&self) -> usize {
        self.tokens.len()
    }

    pub(crate) fn savepoint_position(&self, name: &str) -> Option<usize> {
        self.savepoints().iter().position(|sp| sp == name)
    }

    pub(crate) fn push_savepoint(&mut self, name: &str) {
        if let Some(tx) = self.active.as_mut() {
            tx.savepoints.push(name.to_owned());
        }
    }

    /// Forget every savepoint at or after `pos`.
    pub(crate) fn truncate_savepoints(&mut self, pos: usize) {
        if let Some(tx) = self.active.as_mut() {
            tx.savepoints.truncate(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_follow_their_transaction() {
        let mut state = TxState::default();
        assert_eq!(state.mint_token(TokenRole::Owner), None);

        state.start();
        let owner = state.mint_token(TokenRole::Owner).unwrap();
        let joined = state.mint_token(TokenRole::Joined).unwrap();
        assert_ne!(owner, joined);
        assert!(owner.starts_with("tx_"));
        assert_eq!(state.token_status(&owner), TokenStatus::Live(TokenRole::Owner));
        assert_eq!(state.token_status(&joined), TokenStatus::Live(TokenRole::Joined));

        state.detach(&joined);
        assert_eq!(state.token_status(&joined), TokenStatus::Finished);
        assert_eq!(state.token_status(&owner), TokenStatus::Live(TokenRole::Owner));

        state.finish();
        assert_eq!(state.token_status(&owner), TokenStatus::Finished);

        state.start();
        assert_eq!(state.token_status(&joined), TokenStatus::Finished);
        state.retire(&joined);
        assert_eq!(state.token_status(&joined), TokenStatus::Unknown);
        assert_eq!(state.token_status("tx_never"), TokenStatus::Unknown);
        assert_eq!(state.outstanding_tokens(), 1);
    }

    #[test]
    fn token_table_keeps_one_finished_transaction() {
        let mut state = TxState::default();
        let mut last = None;
        for _ in 0..1000 {
            state.start();
            let owner = state.mint_token(TokenRole::Owner).unwrap();
            let joined = state.mint_token(TokenRole::Joined).unwrap();
            state.detach(&joined);
            state.finish();
            assert!(state.outstanding_tokens() <= 4);
            last = Some(owner);
        }
        let last = last.unwrap();
        assert_eq!(state.outstanding_tokens(), 4);

        state.start();
        assert_eq!(state.token_status(&last), TokenStatus::Finished);
        state.finish();
        state.start();
        assert_eq!(state.token_status(&last), TokenStatus::Unknown);
        assert_eq!(state.outstanding_tokens(), 0);
    }

    #[test]
    fn savepoint_stack_is_scoped_to_the_transaction() {
        let mut state = TxState::default();
        state.push_savepoint("ignored");
        assert_eq!(state.depth(), 0);

        state.start();
        for name in ["a", "b", "c"] {
            state.push_savepoint(name);
        }
        assert_eq!(state.savepoint_position("b"), Some(1));
        state.truncate_savepoints(1);
        assert_eq!(state.savepoints(), ["a".to_owned()]);

        state.finish();
        assert!(state.savepoints().is_empty());
        state.start();
        assert_eq!(state.savepoint_position("a"), None);
    }
}
