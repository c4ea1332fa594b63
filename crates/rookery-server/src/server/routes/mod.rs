// Route modules for the Rookery Server API

pub mod chat; // WebSocket endpoint for chat relay sessions
