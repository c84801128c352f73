//! Operation descriptors handed to the opaque signer/submitter.

use serde::Serialize;

use super::types::{Address, Identity};

/// A record-mutating instruction understood by the backend program.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Instruction {
  CreateEntry { title: String, message: String },
  UpdateEntry { title: String, message: String },
  DeleteEntry { title: String },
}

/// A fully addressed operation ready for signing and submission.
#[derive(Debug, Clone, Serialize)]
pub struct OperationDescriptor {
  pub program: Address,
  pub signer: Identity,
  pub instruction: Instruction,
}
