//! The per-cluster, per-cycle unit produced by the BCL and CBCL codecs.

/// A called base, from the two base bits of a BCL byte or CBCL nibble
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nucleotide {
    A,
    C,
    G,
    T,
}

impl Nucleotide {
    /// Only the low two bits are used: `00`=A, `01`=C, `10`=G, `11`=T
    #[inline]
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Nucleotide::A,
            1 => Nucleotide::C,
            2 => Nucleotide::G,
            _ => Nucleotide::T,
        }
    }

    #[inline]
    pub fn bits(self) -> u8 {
        match self {
            Nucleotide::A => 0,
            Nucleotide::C => 1,
            Nucleotide::G => 2,
            Nucleotide::T => 3,
        }
    }

    #[inline]
    pub fn to_ascii(self) -> u8 {
        match self {
            Nucleotide::A => b'A',
            Nucleotide::C => b'C',
            Nucleotide::G => b'G',
            Nucleotide::T => b'T',
        }
    }
}

/// One cluster's decoded call at one cycle.
///
/// `NoCall` is distinct from `Called(A)`: an A call has base bits `00` too,
/// so the codecs decide "no call" from the whole byte (BCL) or from the
/// quality bits (CBCL), never from the base bits alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallCode {
    NoCall,
    Called(Nucleotide),
}

impl CallCode {
    /// BCL: a zero byte is a no-call, anything else carries the base in its low bits
    #[inline]
    pub fn from_bcl_byte(byte: u8) -> Self {
        if byte == 0 {
            CallCode::NoCall
        } else {
            CallCode::Called(Nucleotide::from_bits(byte))
        }
    }

    /// CBCL: a nibble is `QQBB`; zero quality bits mean no call
    #[inline]
    pub fn from_cbcl_nibble(nibble: u8) -> Self {
        if nibble & 0b1100 == 0 {
            CallCode::NoCall
        } else {
            CallCode::Called(Nucleotide::from_bits(nibble))
        }
    }

    /// The ASCII base letter for this call, `N` for no-call
    #[inline]
    pub fn to_base(self) -> u8 {
        match self {
            CallCode::NoCall => b'N',
            CallCode::Called(nucleotide) => nucleotide.to_ascii(),
        }
    }
}
