mod message;
mod server;
mod session_table;
