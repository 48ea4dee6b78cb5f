// Domain services

pub mod reconcile;

pub use reconcile::*;
