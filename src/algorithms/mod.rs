//! Core algorithms: the time-lag matching engine.

pub mod matching;
