pub mod client;
pub mod context;
pub mod credential_cache;
pub mod enctype;
pub mod error;
pub mod principal;
pub mod provider;
pub mod renewal;
pub mod store;

pub use self::{
    client::KerberosClient,
    context::ClientConfig,
    credential_cache::{Address, AuthData, Credential, CredentialCache, TicketTimes},
    enctype::Enctype,
    error::Error,
    principal::{NameType, Principal},
    provider::{AuthProvider, KdcTicket, Login, LoginOptions},
    renewal::{Refresh, RenewalScheduler, RenewalSettings, SchedulerState},
    store::{CredentialStore, Identity, LoginSource},
};

pub type Flags = i32;
pub type Timestamp = i32;
pub type Data = Vec<u8>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyblock {
    pub enctype: Enctype,
    pub contents: Data,
}
