//! `tracker-api`: the client's view of the remote authority.
//!
//! One [`AuthApi`] method per consumed endpoint. [`HttpAuthApi`] talks to the
//! real server over `reqwest`; [`InMemoryAuthApi`] is a scripted stand-in for
//! tests and offline development. Both report failures the same way: a
//! [`Notice`] for the user and, on 401, the [`SessionHooks::unauthenticated`]
//! callback.

pub mod client;
pub mod config;
pub mod dto;
pub mod http;
pub mod in_memory;
pub mod notice;
pub mod response;

pub use client::{AuthApi, SessionHooks, report_failure};
pub use config::ClientConfig;
pub use dto::{
    ChangePasswordRequest, InitPasswordRequest, InitResponse, InitStatus, LoginResponse,
    MessageResponse, OAuthLoginRequest, PasswordLoginRequest, PermissionList, QrTicket, RoleRef,
    UserProfile,
};
pub use http::HttpAuthApi;
pub use in_memory::{Endpoint, InMemoryAuthApi, RemoteAccount};
pub use notice::{Notice, NoticeLevel, Notifier, RecordingNotifier, TracingNotifier};
pub use response::classify_response;
