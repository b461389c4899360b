//! Turn chunks of call codes into chunks of ASCII bases.

use crossbeam_channel::{Receiver, Sender};

use crate::call_code::CallCode;
use crate::error::Result;
use crate::stream::{recv_chunk, send_chunk, CancelToken};

/// `N` for a no-call, otherwise `A`, `C`, `G` or `T`
pub fn decode_bases(calls: &[CallCode]) -> Vec<u8> {
    calls.iter().map(|c| c.to_base()).collect()
}

/// Map every chunk from `input` to bases, one output chunk per input chunk,
/// until `input` closes.
pub fn base_decoder(
    input: Receiver<Vec<CallCode>>,
    output: Sender<Vec<u8>>,
    cancel: &CancelToken,
) -> Result<()> {
    while let Some(calls) = recv_chunk(&input, cancel)? {
        send_chunk(&output, decode_bases(&calls), cancel)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_code::Nucleotide;
    use crossbeam_channel::bounded;

    #[test]
    fn bases() {
        let calls = [
            CallCode::Called(Nucleotide::C),
            CallCode::Called(Nucleotide::G),
            CallCode::Called(Nucleotide::T),
            CallCode::NoCall,
            CallCode::Called(Nucleotide::A),
        ];
        assert_eq!(decode_bases(&calls), b"CGTNA".to_vec());
    }

    #[test]
    fn keeps_chunk_boundaries() {
        let (call_tx, call_rx) = bounded(4);
        let (base_tx, base_rx) = bounded(4);

        call_tx.send(vec![CallCode::NoCall; 3]).unwrap();
        call_tx.send(vec![]).unwrap();
        call_tx.send(vec![CallCode::Called(Nucleotide::A)]).unwrap();
        drop(call_tx);

        base_decoder(call_rx, base_tx, &CancelToken::new()).unwrap();

        let chunks: Vec<Vec<u8>> = base_rx.iter().collect();
        assert_eq!(chunks, vec![b"NNN".to_vec(), vec![], b"A".to_vec()]);
    }
}
