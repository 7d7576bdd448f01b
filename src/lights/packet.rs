use super::LightCommand;

/// Frame header plus protocol header
pub const HEADER_LEN: usize = 36;

/// Protocol number carried in every header
pub const PROTOCOL: u16 = 1024;

/// Fixed client identifier
pub const SOURCE_ID: u32 = 0x1234_5678;

const ADDRESSABLE: u16 = 1 << 12;
const SEQUENCE: u8 = 1;

fn header(out: &mut Vec<u8>, size: u16, message_type: u16) {
    out.extend_from_slice(&size.to_le_bytes());
    // Untagged, origin 0
    out.extend_from_slice(&(PROTOCOL | ADDRESSABLE).to_le_bytes());
    out.extend_from_slice(&SOURCE_ID.to_le_bytes());
    // Zero target addresses every bulb on the segment
    out.extend_from_slice(&[0u8; 8]);
    out.extend_from_slice(&[0u8; 6]);
    // No ack or response required
    out.push(0);
    out.push(SEQUENCE);
    out.extend_from_slice(&0u64.to_le_bytes());
    out.extend_from_slice(&message_type.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
}

fn payload_len(command: &LightCommand) -> usize {
    match command {
        LightCommand::SetPower { .. } => 6,
        LightCommand::SetColor { .. } => 13,
        LightCommand::SetWaveform { .. } => 21,
    }
}

/// Encode `command` as one datagram
pub fn encode(command: &LightCommand) -> Vec<u8> {
    let size = HEADER_LEN + payload_len(command);
    let mut out = Vec::with_capacity(size);
    header(&mut out, size as u16, command.message_type());

    match command {
        LightCommand::SetPower { on, duration_ms } => {
            let level: u16 = if *on { u16::MAX } else { 0 };
            out.extend_from_slice(&level.to_le_bytes());
            out.extend_from_slice(&duration_ms.to_le_bytes());
        }
        LightCommand::SetColor { color, duration_ms } => {
            out.push(0);
            for value in [color.hue, color.saturation, color.brightness, color.kelvin] {
                out.extend_from_slice(&value.to_le_bytes());
            }
            out.extend_from_slice(&duration_ms.to_le_bytes());
        }
        LightCommand::SetWaveform {
            transient,
            color,
            period_ms,
            cycles,
            skew_ratio,
            waveform,
        } => {
            out.push(0);
            out.push(u8::from(*transient));
            for value in [color.hue, color.saturation, color.brightness, color.kelvin] {
                out.extend_from_slice(&value.to_le_bytes());
            }
            out.extend_from_slice(&period_ms.to_le_bytes());
            out.extend_from_slice(&cycles.to_le_bytes());
            out.extend_from_slice(&skew_ratio.to_le_bytes());
            out.push(waveform.code());
        }
    }

    out
}
