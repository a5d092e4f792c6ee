//! Module that contains the consistent-hash ring used to place keys on nodes
pub mod ring;
