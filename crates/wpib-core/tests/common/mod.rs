#![allow(dead_code)]

pub mod wpib_server;
