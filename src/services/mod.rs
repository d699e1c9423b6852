pub mod bootstrap;
pub mod federation;
pub mod mock_data;
pub mod provisioner;
