// Library root: exposes the API layers so integration tests can drive them
// without a socket.

pub mod api;
pub mod protocol;
pub mod ws_server;
