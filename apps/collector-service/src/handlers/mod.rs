//! HTTP handlers, one module per external-interface group (§6). Each
//! handler is a thin adapter: parse the request, call into `decision`,
//! `scheduler`, or a repository, and render the JSON envelope — no
//! business logic lives here.

pub mod blacklist;
pub mod control;
pub mod credentials;
pub mod fortinet;
pub mod health;
pub mod ingest;
pub mod whitelist;
