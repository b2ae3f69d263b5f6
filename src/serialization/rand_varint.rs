//! Random numbers spread evenly across varint encoded lengths, for exercising the codec.

use rand::distributions::uniform::Uniform;
use rand::distributions::Distribution;
use rand::Rng;

/// Smallest number in our varint encoding that takes the given number of bytes
pub fn smallest_number_in_n_byte_varint(byte_length: usize) -> u64 {
    assert!((1..=9).contains(&byte_length));

    match byte_length {
        1 => 0,
        // one greater than the largest of the previous length
        _ => largest_number_in_n_byte_varint(byte_length - 1) + 1,
    }
}

/// Largest number in our varint encoding that takes the given number of bytes
pub fn largest_number_in_n_byte_varint(byte_length: usize) -> u64 {
    assert!((1..=9).contains(&byte_length));

    match byte_length {
        9 => u64::max_value(),
        // every bit of the first `byte_length` 7-bit chunks
        _ => (1_u64 << (7 * byte_length)) - 1,
    }
}

/// Uniformly random values tend to take 9 bytes to encode. This picks an encoded length first,
/// then a value of that length, so every length from 1 to 9 shows up equally often.
pub struct RandomVarintEncodedLengthIter<R: Rng> {
    ranges: Vec<Uniform<u64>>,
    rng: R,
}

impl<R: Rng> RandomVarintEncodedLengthIter<R> {
    pub fn new(rng: R) -> RandomVarintEncodedLengthIter<R> {
        RandomVarintEncodedLengthIter {
            ranges: (1..=9)
                .map(|len| {
                    Uniform::new_inclusive(
                        smallest_number_in_n_byte_varint(len),
                        largest_number_in_n_byte_varint(len),
                    )
                })
                .collect(),
            rng,
        }
    }
}

impl<R: Rng> Iterator for RandomVarintEncodedLengthIter<R> {
    type Item = u64;

    fn next(&mut self) -> Option<Self::Item> {
        let picked = self.rng.gen_range(0..self.ranges.len());
        Some(self.ranges[picked].sample(&mut self.rng))
    }
}

#[test]
fn largest_number_in_n_byte_varint_correct() {
    for len in 1..9 {
        let largest = largest_number_in_n_byte_varint(len);
        assert_eq!(len as u32 * 7, largest.count_ones());
        // any larger and it takes another byte
        assert_eq!(largest.leading_zeros() - 1, (largest + 1).leading_zeros());
    }
}
