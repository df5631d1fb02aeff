#![allow(dead_code, unused_imports)]

pub use gitwatch_test_utils::builders;
pub use gitwatch_test_utils::{
    assert_quiet, finish, init_tracing, recv_within, spawn_session, with_timeout, Call, FakeBackend,
    FakeHandle, RunningSession,
};
