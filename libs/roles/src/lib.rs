//! Strongly-typed messages, keys and committee definitions for the operator
//! role of the DV consensus protocol.

pub mod operator;
