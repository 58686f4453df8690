//! Payload masking, RFC 6455 section 5.3.

/// XORs every byte of `buf` with `key[i % 4]`. Applying the same key twice restores the input.
#[inline]
pub fn apply_mask(buf: &mut [u8], key: [u8; 4]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc_example() {
        // "Hello" masked with 37 fa 21 3d, RFC 6455 section 5.7
        let mut data = *b"Hello";
        apply_mask(&mut data, [0x37, 0xfa, 0x21, 0x3d]);
        assert_eq!(data, [0x7f, 0x9f, 0x4d, 0x51, 0x58]);
    }

    #[test]
    fn mask_is_its_own_inverse() {
        let original: Vec<u8> = (0..=255).collect();
        let key = [0xde, 0xad, 0xbe, 0xef];
        let mut data = original.clone();
        apply_mask(&mut data, key);
        assert_ne!(data, original);
        apply_mask(&mut data, key);
        assert_eq!(data, original);
    }

    #[test]
    fn key_repeats_every_four_bytes() {
        let mut data = [0u8; 10];
        apply_mask(&mut data, [1, 2, 3, 4]);
        assert_eq!(data, [1, 2, 3, 4, 1, 2, 3, 4, 1, 2]);

        let mut empty: [u8; 0] = [];
        apply_mask(&mut empty, [1, 2, 3, 4]);
    }
}
