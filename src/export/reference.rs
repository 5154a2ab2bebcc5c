//! Reference window for export sanity checks
//!
//! One downsampled window recorded during a heat treatment. A trained model
//! is expected to assign it to the Heat class.

/// Class index the reference window belongs to
pub const REFERENCE_HEAT_CLASS: usize = 1;

/// 100 downsampled values, one per 6 seconds
pub const REFERENCE_HEAT_WINDOW: [f32; 100] = [
    0.4289, 0.4291, 0.4288, 0.4287, 0.4288, 0.4288, 0.4286, 0.4286, 0.4286, 0.4286,
    0.4288, 0.4288, 0.4288, 0.4287, 0.4284, 0.4282, 0.4280, 0.4279, 0.4278, 0.4278,
    0.4279, 0.4279, 0.4281, 0.4282, 0.4283, 0.4284, 0.4284, 0.4283, 0.4281, 0.4279,
    0.4279, 0.4278, 0.4277, 0.4280, 0.4281, 0.4281, 0.4281, 0.4281, 0.4284, 0.4284,
    0.4285, 0.4286, 0.4286, 0.4287, 0.4288, 0.4287, 0.4287, 0.4285, 0.4283, 0.4281,
    0.4280, 0.4280, 0.4280, 0.4280, 0.4280, 0.4279, 0.4281, 0.4282, 0.4283, 0.4284,
    0.4286, 0.4288, 0.4292, 0.4295, 0.4295, 0.4296, 0.4296, 0.4295, 0.4293, 0.4291,
    0.4290, 0.4290, 0.4291, 0.4295, 0.4295, 0.4295, 0.4294, 0.4293, 0.4290, 0.4288,
    0.4287, 0.4287, 0.4286, 0.4286, 0.4285, 0.4286, 0.4286, 0.4286, 0.4287, 0.4288,
    0.4289, 0.4291, 0.4293, 0.4294, 0.4295, 0.4295, 0.4294, 0.4294, 0.4294, 0.4293,
];
