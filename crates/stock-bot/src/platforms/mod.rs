//! Chat platform front ends

pub mod kakao;

pub use kakao::{SkillRequest, SkillResponse, router};
