//! Types shared between the gcipher API service and its operator tooling.
//!
//! [`params`] holds the request bodies accepted by the API, [`views`] the
//! response bodies it produces, and [`caller`] the identity of whoever is
//! making a request.

pub mod caller;
pub mod params;
pub mod views;
