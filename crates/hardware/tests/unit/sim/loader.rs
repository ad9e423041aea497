//! # Image Loading Tests
//!
//! Raw binary, hex word list and ELF decoding, format detection and file reading.

use std::io::Write;
use std::path::Path;

use pretty_assertions::assert_eq;
use rstest::rstest;
use rvboot_core::common::error::ImageError;
use rvboot_core::sim::{ImageFormat, InstructionImage};
use tempfile::{Builder, NamedTempFile};

use crate::common::harness::SAMPLE_IMAGE;

/// Writes `data` to a temporary file with the given suffix.
fn create_temp_image(data: &[u8], suffix: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}

/// Builds a little-endian ELF32 RISC-V executable with one `PT_LOAD` per segment.
///
/// Each segment is `(vaddr, file bytes, memsz)`.
fn elf32(entry: u32, segments: &[(u32, Vec<u8>, u32)]) -> Vec<u8> {
    const EHDR: usize = 52;
    const PHDR: usize = 32;
    let phnum = segments.len();

    let mut out = Vec::new();
    out.extend_from_slice(&[0x7f, b'E', b'L', b'F', 1, 1, 1, 0]);
    out.extend_from_slice(&[0; 8]);
    out.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
    out.extend_from_slice(&243u16.to_le_bytes()); // EM_RISCV
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&entry.to_le_bytes());
    out.extend_from_slice(&(EHDR as u32).to_le_bytes()); // e_phoff
    out.extend_from_slice(&0u32.to_le_bytes()); // e_shoff
    out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
    out.extend_from_slice(&(EHDR as u16).to_le_bytes());
    out.extend_from_slice(&(PHDR as u16).to_le_bytes());
    out.extend_from_slice(&(phnum as u16).to_le_bytes());
    out.extend_from_slice(&40u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());

    let mut offset = (EHDR + PHDR * phnum) as u32;
    for (vaddr, data, memsz) in segments {
        out.extend_from_slice(&1u32.to_le_bytes()); // PT_LOAD
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&vaddr.to_le_bytes());
        out.extend_from_slice(&vaddr.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&memsz.to_le_bytes());
        out.extend_from_slice(&5u32.to_le_bytes()); // R+X
        out.extend_from_slice(&4u32.to_le_bytes());
        offset += data.len() as u32;
    }
    for (_, data, _) in segments {
        out.extend_from_slice(data);
    }
    out
}

fn le_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

#[test]
fn test_from_words() {
    let image = InstructionImage::from_words(SAMPLE_IMAGE.to_vec());
    assert_eq!(image.words(), &SAMPLE_IMAGE);
    assert_eq!(image.len(), 4);
    assert!(!image.is_empty());
    assert_eq!(image.entry(), None);
}

#[test]
fn test_from_le_bytes() {
    let image = InstructionImage::from_le_bytes(&le_bytes(&SAMPLE_IMAGE)).unwrap();
    assert_eq!(image.into_words(), SAMPLE_IMAGE.to_vec());
}

#[test]
fn test_from_le_bytes_misaligned() {
    assert!(matches!(
        InstructionImage::from_le_bytes(&[0x13, 0, 0, 0, 0x93]),
        Err(ImageError::Misaligned { len: 5 })
    ));
}

#[test]
fn test_from_hex_text_plain() {
    let text = "00000013\n00000093\n\n0x00000001 0xAB\n";
    let image = InstructionImage::from_hex_text(text).unwrap();
    assert_eq!(image.words(), &SAMPLE_IMAGE);
}

#[test]
fn test_from_hex_text_c_array() {
    let text = "// generated by objdump\n\
                #include <stdint.h>\n\
                const uint32_t assembly[] = {\n\
                    0x00000013, 0x00000093, // nop; li ra, 0\n\
                    0x00000001U, 0x000000abu\n\
                };\n";
    let image = InstructionImage::from_hex_text(text).unwrap();
    assert_eq!(image.words(), &SAMPLE_IMAGE);
}

#[test]
fn test_from_hex_text_bad_token_names_line() {
    let err = InstructionImage::from_hex_text("00000013\n0x1234567G\n").unwrap_err();
    match err {
        ImageError::BadHexWord { line, token } => {
            assert_eq!(line, 2);
            assert_eq!(token, "0x1234567G");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_from_hex_text_rejects_wide_words() {
    assert!(matches!(
        InstructionImage::from_hex_text("0x100000000"),
        Err(ImageError::BadHexWord { line: 1, .. })
    ));
}

#[test]
fn test_from_elf_single_segment() {
    let elf = elf32(0x100, &[(0x100, le_bytes(&SAMPLE_IMAGE), 16)]);
    let image = InstructionImage::from_elf(&elf).unwrap();
    assert_eq!(image.words(), &SAMPLE_IMAGE);
    assert_eq!(image.origin(), 0x100);
    assert_eq!(image.entry(), Some(0x100));
}

#[test]
fn test_from_elf_fills_gaps_and_bss() {
    let elf = elf32(
        0x1000,
        &[
            (0x1010, le_bytes(&[0xCC]), 8),
            (0x1000, le_bytes(&[0xAA, 0xBB]), 8),
        ],
    );
    let image = InstructionImage::from_elf(&elf).unwrap();
    assert_eq!(image.words(), &[0xAA, 0xBB, 0, 0, 0xCC, 0]);
    assert_eq!(image.origin(), 0x1000);
}

#[test]
fn test_from_elf_without_segments() {
    let elf = elf32(0, &[]);
    assert!(matches!(
        InstructionImage::from_elf(&elf),
        Err(ImageError::NoLoadableContent)
    ));
}

#[test]
fn test_from_elf_file_bytes_exceed_memory_size() {
    let elf = elf32(0, &[(0, vec![0x13; 8], 4)]);
    let err = InstructionImage::from_elf(&elf).unwrap_err();
    assert!(matches!(err, ImageError::Elf(_)));
    assert!(err.to_string().contains("8 file bytes"));
}

#[test]
fn test_from_elf_rejects_oversized_span() {
    let elf = elf32(0, &[(0, le_bytes(&SAMPLE_IMAGE), 0xFFFF_FFF0)]);
    let err = InstructionImage::from_elf(&elf).unwrap_err();
    assert!(matches!(err, ImageError::Elf(_)));
    assert!(err.to_string().contains("exceeds"));
}

#[test]
fn test_from_elf_span_across_distant_segments_is_bounded() {
    let elf = elf32(
        0,
        &[
            (0, le_bytes(&[0xAA]), 4),
            (0x8000_0000, le_bytes(&[0xBB]), 4),
        ],
    );
    assert!(matches!(
        InstructionImage::from_elf(&elf),
        Err(ImageError::Elf(_))
    ));
}

#[test]
fn test_from_elf_garbage() {
    assert!(matches!(
        InstructionImage::from_elf(b"definitely not an executable"),
        Err(ImageError::Elf(_))
    ));
}

#[rstest]
#[case("program.hex", b"0013".as_slice(), ImageFormat::Hex)]
#[case("program.H", b"0013".as_slice(), ImageFormat::Hex)]
#[case("program.bin", b"\x13\0\0\0".as_slice(), ImageFormat::Binary)]
#[case("program", b"\x13\0\0\0".as_slice(), ImageFormat::Binary)]
#[case("program.hex", b"\x7fELF\x01\x01".as_slice(), ImageFormat::Elf)]
fn test_detect(#[case] name: &str, #[case] bytes: &[u8], #[case] expected: ImageFormat) {
    assert_eq!(ImageFormat::detect(Path::new(name), bytes), expected);
}

#[rstest]
#[case("bin", ImageFormat::Binary)]
#[case("RAW", ImageFormat::Binary)]
#[case("hex", ImageFormat::Hex)]
#[case("elf", ImageFormat::Elf)]
fn test_format_from_str(#[case] text: &str, #[case] expected: ImageFormat) {
    assert_eq!(text.parse::<ImageFormat>().unwrap(), expected);
}

#[test]
fn test_format_from_str_unknown() {
    assert!("srec".parse::<ImageFormat>().is_err());
}

#[test]
fn test_from_file_binary() {
    let file = create_temp_image(&le_bytes(&SAMPLE_IMAGE), ".bin");
    let image = InstructionImage::from_file(file.path(), None).unwrap();
    assert_eq!(image.words(), &SAMPLE_IMAGE);
}

#[test]
fn test_from_file_hex_by_extension() {
    let file = create_temp_image(b"13 93 1 ab\n", ".hex");
    let image = InstructionImage::from_file(file.path(), None).unwrap();
    assert_eq!(image.words(), &SAMPLE_IMAGE);
}

#[test]
fn test_from_file_elf_by_magic() {
    let elf = elf32(0, &[(0, le_bytes(&SAMPLE_IMAGE), 16)]);
    let file = create_temp_image(&elf, ".img");
    let image = InstructionImage::from_file(file.path(), None).unwrap();
    assert_eq!(image.words(), &SAMPLE_IMAGE);
}

#[test]
fn test_from_file_explicit_format_wins() {
    let file = create_temp_image(b"00000013", ".bin");
    let image = InstructionImage::from_file(file.path(), Some(ImageFormat::Hex)).unwrap();
    assert_eq!(image.words(), &[0x13]);
}

#[test]
fn test_from_file_missing() {
    let err = InstructionImage::from_file("/nonexistent/program.bin", None).unwrap_err();
    assert!(matches!(err, ImageError::Io { .. }));
    assert!(err.to_string().contains("/nonexistent/program.bin"));
}
