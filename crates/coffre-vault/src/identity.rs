//! Identity-derived key material and its epochs.
//!
//! Key material is `"{user_id}-{email}"`. Changing either input produces a
//! new [`KeyEpoch`]; the [`KeyRing`] keeps older materials so envelopes sealed
//! before the change still open and can be migrated.

use std::collections::BTreeMap;

use coffre_crypto_core::{CryptoError, KeyEpoch, KeyMaterial};

use crate::error::VaultError;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The authenticated user, as supplied by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: String,
    pub email: String,
}

impl UserIdentity {
    #[must_use]
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }

    /// Build the key material for this identity.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Configuration`] if the user id or email is blank.
    pub fn key_material(&self) -> Result<KeyMaterial, CryptoError> {
        let user_id = self.user_id.trim();
        let email = self.email.trim();
        if user_id.is_empty() || email.is_empty() {
            return Err(CryptoError::Configuration(
                "an authenticated user id and email are required".into(),
            ));
        }
        KeyMaterial::new(format!("{user_id}-{email}"))
    }
}

// ---------------------------------------------------------------------------
// Key ring
// ---------------------------------------------------------------------------

/// Current key material plus every historical material still needed.
#[derive(Debug, Clone)]
pub struct KeyRing {
    current_epoch: KeyEpoch,
    current: KeyMaterial,
    history: BTreeMap<KeyEpoch, KeyMaterial>,
}

impl KeyRing {
    /// A ring holding only `material` at [`KeyEpoch::INITIAL`].
    #[must_use]
    pub fn new(material: KeyMaterial) -> Self {
        Self::at_epoch(KeyEpoch::INITIAL, material)
    }

    /// A ring whose current material is `material` at `epoch`.
    #[must_use]
    pub fn at_epoch(epoch: KeyEpoch, material: KeyMaterial) -> Self {
        Self {
            current_epoch: epoch,
            current: material,
            history: BTreeMap::new(),
        }
    }

    /// A ring for `identity` at [`KeyEpoch::INITIAL`].
    ///
    /// # Errors
    ///
    /// See [`UserIdentity::key_material`].
    pub fn for_identity(identity: &UserIdentity) -> Result<Self, CryptoError> {
        Ok(Self::new(identity.key_material()?))
    }

    /// Make `material` current under the next epoch; the previous material
    /// moves to history.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Config`] if the epoch counter is exhausted.
    pub fn rotate(&mut self, material: KeyMaterial) -> Result<KeyEpoch, VaultError> {
        let next = self
            .current_epoch
            .next()
            .ok_or_else(|| VaultError::Config("key epoch counter exhausted".into()))?;
        let previous = std::mem::replace(&mut self.current, material);
        self.history.insert(self.current_epoch, previous);
        self.current_epoch = next;
        tracing::info!(epoch = %next, "rotated key material");
        Ok(next)
    }

    /// Register material for an epoch older than the current one.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Config`] if `epoch` is not older than the
    /// current epoch.
    pub fn insert_historical(
        &mut self,
        epoch: KeyEpoch,
        material: KeyMaterial,
    ) -> Result<(), VaultError> {
        if epoch >= self.current_epoch {
            return Err(VaultError::Config(format!(
                "historical epoch {epoch} must precede current epoch {}",
                self.current_epoch
            )));
        }
        self.history.insert(epoch, material);
        Ok(())
    }

    #[must_use]
    pub const fn current_epoch(&self) -> KeyEpoch {
        self.current_epoch
    }

    #[must_use]
    pub const fn current(&self) -> &KeyMaterial {
        &self.current
    }

    /// Material for `epoch`, current or historical.
    #[must_use]
    pub fn material(&self, epoch: KeyEpoch) -> Option<&KeyMaterial> {
        if epoch == self.current_epoch {
            Some(&self.current)
        } else {
            self.history.get(&epoch)
        }
    }

    /// Every epoch the ring can open, oldest first.
    #[must_use]
    pub fn epochs(&self) -> Vec<KeyEpoch> {
        self.history
            .keys()
            .copied()
            .chain(std::iter::once(self.current_epoch))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn material(s: &str) -> KeyMaterial {
        KeyMaterial::new(s).unwrap()
    }

    #[test]
    fn key_material_joins_id_and_email() {
        let identity = UserIdentity::new("42", "alice@example.com");
        assert_eq!(identity.key_material().unwrap().expose(), "42-alice@example.com");
    }

    #[test]
    fn key_material_trims_inputs() {
        let identity = UserIdentity::new(" 42 ", " alice@example.com\n");
        assert_eq!(identity.key_material().unwrap().expose(), "42-alice@example.com");
    }

    #[test]
    fn blank_identity_is_rejected() {
        for identity in [
            UserIdentity::new("", "alice@example.com"),
            UserIdentity::new("42", ""),
            UserIdentity::new("  ", "  "),
        ] {
            assert!(matches!(
                identity.key_material(),
                Err(CryptoError::Configuration(_))
            ));
        }
    }

    #[test]
    fn new_ring_starts_at_initial_epoch() {
        let ring = KeyRing::new(material("a"));
        assert_eq!(ring.current_epoch(), KeyEpoch::INITIAL);
        assert_eq!(ring.epochs(), vec![KeyEpoch::INITIAL]);
        assert_eq!(ring.material(KeyEpoch::INITIAL).unwrap().expose(), "a");
        assert!(ring.material(KeyEpoch(1)).is_none());
    }

    #[test]
    fn rotate_keeps_previous_material() {
        let mut ring = KeyRing::new(material("old"));
        let epoch = ring.rotate(material("new")).unwrap();

        assert_eq!(epoch, KeyEpoch(1));
        assert_eq!(ring.current_epoch(), KeyEpoch(1));
        assert_eq!(ring.current().expose(), "new");
        assert_eq!(ring.material(KeyEpoch(0)).unwrap().expose(), "old");
        assert_eq!(ring.epochs(), vec![KeyEpoch(0), KeyEpoch(1)]);
    }

    #[test]
    fn rotate_fails_when_exhausted() {
        let mut ring = KeyRing::at_epoch(KeyEpoch(u32::MAX), material("a"));
        assert!(matches!(
            ring.rotate(material("b")),
            Err(VaultError::Config(_))
        ));
        assert_eq!(ring.current().expose(), "a");
    }

    #[test]
    fn insert_historical_requires_older_epoch() {
        let mut ring = KeyRing::at_epoch(KeyEpoch(3), material("now"));
        ring.insert_historical(KeyEpoch(1), material("then")).unwrap();
        assert_eq!(ring.material(KeyEpoch(1)).unwrap().expose(), "then");

        assert!(ring.insert_historical(KeyEpoch(3), material("x")).is_err());
        assert!(ring.insert_historical(KeyEpoch(4), material("x")).is_err());
        assert_eq!(ring.current().expose(), "now");
    }

    #[test]
    fn debug_does_not_leak_material() {
        let ring = KeyRing::new(material("42-alice@example.com"));
        assert!(!format!("{ring:?}").contains("alice"));
    }
}
