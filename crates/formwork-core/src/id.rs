//! Opaque identities for field controllers and array slots
//!
//! Identity is decoupled from display name: a field that changes its name,
//! or an array slot that shifts index, keeps its id, so a stale unregister
//! aimed at the old name cannot drop the wrong registration. Uniqueness is
//! only required within one form instance's lifetime.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of one field controller, allocated at construction and stable
/// across renames and array reordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldId(Uuid);

impl FieldId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for FieldId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for FieldId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

/// Identity of one field-array slot, independent of the registration id of
/// whatever field controller mounts into the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotId(Uuid);

impl SlotId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for SlotId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for SlotId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}
