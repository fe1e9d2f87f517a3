// Library root: the live side of draftline (draft host client, poll loop and
// monitor) on top of `draftline_core`.

pub mod host;
pub mod monitor;
pub mod poller;

