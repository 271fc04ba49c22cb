// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Defines the types that describe what goes into a device region and who reads it. */

pub mod crepr;
pub mod visible_to;

pub use crepr::CRepr;
