//! fleet-managers daemon library
//!
//! Resolves manager URLs to the plugins that own them and fetches device
//! information from those plugins. The binary is a thin shell over
//! [`interface::ExternalInterface`].

pub mod config;
pub mod contact;
pub mod device;
pub mod directory;
pub mod interface;
pub mod registry;
pub mod store;
