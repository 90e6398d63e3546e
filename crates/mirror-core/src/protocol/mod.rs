//! Protocol module containing message types, the video descriptor, and the
//! byte-level codec.

pub mod codec;
pub mod descriptor;
pub mod messages;

pub use codec::{
    decode_control_event, decode_control_record, decode_frame_header, decode_pairing_challenge,
    discovery_reply, encode_control_event, encode_pairing_challenge, encode_video_frame,
    is_discovery_response, FramingError,
};
pub use descriptor::VideoDescriptor;
pub use messages::*;
