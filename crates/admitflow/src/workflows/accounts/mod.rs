//! Accounts, sessions, and agent administration.

pub mod admin;
pub mod domain;
pub mod memory;
pub mod password;
pub mod repository;
pub mod router;
pub mod service;
pub mod session;

pub use admin::{AdminDashboard, AdminService, AgentWorkload};
pub use domain::{
    Account, AgentPatch, AssignRequest, LoginRequest, LoginResponse, NewAccount, NewAgentRequest,
    PasswordChange,
};
pub use memory::InMemoryAccountStore;
pub use repository::AccountStore;
pub use router::{accounts_router, AccountsState};
pub use service::{AccountError, AccountService};
pub use session::{IssuedToken, Session, SessionAuthority, SessionError};
