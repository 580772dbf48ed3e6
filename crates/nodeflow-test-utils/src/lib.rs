//! Mocks and fixtures shared by the nodeflow test suites.

pub mod fixtures;
pub mod mock_orchestrator;
pub mod mock_push;

pub use fixtures::{linear_graph, test_catalog, TEST_CATALOG};
pub use mock_orchestrator::MockOrchestrator;
pub use mock_push::MockPushChannel;
