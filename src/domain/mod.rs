//! Domain layer: payment entity, its status machine, and the ports the
//! application layer talks to.

pub mod payment;
pub mod ports;
pub mod school;
