/// Settings for integrators without any tunable parameters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NullSettings {}
