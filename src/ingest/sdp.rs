//! Session description handed to the decoder so it knows how to read the RTP sink.
//!
//! Generated locally; nothing is negotiated with the sender.

use crate::config::DecoderConfig;

/// Receive-only SDP for one audio stream arriving on `host:port`.
pub fn receive_only(host: &str, port: u16, decoder: &DecoderConfig) -> String {
    let pt = decoder.payload_type;
    format!(
        "v=0\r\n\
         o=- 0 0 IN IP4 {host}\r\n\
         s=cliprec\r\n\
         c=IN IP4 {host}\r\n\
         t=0 0\r\n\
         m=audio {port} RTP/AVP {pt}\r\n\
         a=rtpmap:{pt} {codec}/{clock}/{channels}\r\n\
         a=recvonly\r\n",
        codec = decoder.codec,
        clock = decoder.clock_rate,
        channels = decoder.channels,
    )
}
