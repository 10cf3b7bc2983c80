//! Application layer for growlab: the service facade, the scripted headless
//! runner and the wall-clock daemon.

pub mod app;
