//! Translate host key codes into the byte sequences a real terminal would
//! have emitted, parameterised by the child's current DECCKM (`app_cursor`)
//! state.
//!
//! Host key codes come from `pancurses::Input` — the same library used for
//! rendering (`crate::render`) — rather than from an async input backend,
//! since the popup's event loop is synchronous by design (see `crate::popup`).

use pancurses::Input;

/// Encode one host key event into the bytes to write to the PTY master, or
/// `None` if the key carries no terminal-visible meaning (e.g. `KeyResize`,
/// which the outer loop handles directly).
#[must_use]
pub fn encode(input: Input, app_cursor: bool) -> Option<Vec<u8>> {
    let csi_or_ss3 = |letter: u8| -> Vec<u8> {
        if app_cursor {
            vec![0x1B, b'O', letter]
        } else {
            vec![0x1B, b'[', letter]
        }
    };

    match input {
        Input::Character(c) => Some(encode_char(c)),
        Input::KeyUp => Some(csi_or_ss3(b'A')),
        Input::KeyDown => Some(csi_or_ss3(b'B')),
        Input::KeyRight => Some(csi_or_ss3(b'C')),
        Input::KeyLeft => Some(csi_or_ss3(b'D')),
        Input::KeyHome => Some(csi_or_ss3(b'H')),
        Input::KeyEnd => Some(csi_or_ss3(b'F')),
        Input::KeyPPage => Some(b"\x1b[5~".to_vec()),
        Input::KeyNPage => Some(b"\x1b[6~".to_vec()),
        Input::KeyIC => Some(b"\x1b[2~".to_vec()),
        Input::KeyDC => Some(b"\x1b[3~".to_vec()),
        Input::KeyBTab => Some(b"\x1b[Z".to_vec()),
        Input::KeyBackspace => Some(vec![0x7F]),
        Input::KeyEnter => Some(vec![b'\r']),
        Input::KeyF1 => Some(b"\x1bOP".to_vec()),
        Input::KeyF2 => Some(b"\x1bOQ".to_vec()),
        Input::KeyF3 => Some(b"\x1bOR".to_vec()),
        Input::KeyF4 => Some(b"\x1bOS".to_vec()),
        Input::KeyF5 => Some(b"\x1b[15~".to_vec()),
        Input::KeyF6 => Some(b"\x1b[17~".to_vec()),
        Input::KeyF7 => Some(b"\x1b[18~".to_vec()),
        Input::KeyF8 => Some(b"\x1b[19~".to_vec()),
        Input::KeyF9 => Some(b"\x1b[20~".to_vec()),
        Input::KeyF10 => Some(b"\x1b[21~".to_vec()),
        Input::KeyF11 => Some(b"\x1b[23~".to_vec()),
        Input::KeyF12 => Some(b"\x1b[24~".to_vec()),
        Input::KeyResize => None,
        _ => None,
    }
}

fn encode_char(c: char) -> Vec<u8> {
    match c {
        '\x1b' => vec![0x1B],
        '\x7f' | '\x08' => vec![0x7F],
        '\r' | '\n' => vec![b'\r'],
        _ => {
            let mut buf = [0u8; 4];
            c.encode_utf8(&mut buf).as_bytes().to_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrow_toggles_on_dec_cursor_key_mode() {
        assert_eq!(encode(Input::KeyUp, false), Some(b"\x1b[A".to_vec()));
        assert_eq!(encode(Input::KeyUp, true), Some(b"\x1bOA".to_vec()));
    }

    #[test]
    fn backspace_variants_all_emit_del() {
        assert_eq!(encode(Input::KeyBackspace, false), Some(vec![0x7F]));
        assert_eq!(encode(Input::Character('\x7f'), false), Some(vec![0x7F]));
    }

    #[test]
    fn function_keys_independent_of_app_cursor() {
        assert_eq!(encode(Input::KeyF5, false), encode(Input::KeyF5, true));
        assert_eq!(encode(Input::KeyF5, false), Some(b"\x1b[15~".to_vec()));
    }

    #[test]
    fn plain_character_passes_through_as_utf8() {
        assert_eq!(encode(Input::Character('a'), false), Some(vec![b'a']));
    }

    #[test]
    fn resize_is_not_encoded() {
        assert_eq!(encode(Input::KeyResize, false), None);
    }
}
