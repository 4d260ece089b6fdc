//! Integration tests: full command flows against a scripted page.

mod mock_surface;
mod policy_flow;
mod modal_flow;
