pub mod agent;
pub mod event;
pub mod leaderboard;
pub mod network;
pub mod run;
pub mod status;
