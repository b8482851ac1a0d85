use rand::seq::SliceRandom;
#[cfg(test)] use std::sync::Mutex;



#[cfg(test)]
/// automock expectations for static methods are global - hold this lock to avoid races
pub static MOCK_RANDOM_MUTEX: Mutex<()> = Mutex::new(());

#[cfg_attr(test, mockall::automock)]
pub trait Random {
    /// returns the numbers `0..len` in random order
    fn permutation(len: usize) -> Vec<usize>;
}
pub struct RngRandom {}
impl Random for RngRandom {
    fn permutation(len: usize) -> Vec<usize> {
        let mut result = (0..len).collect::<Vec<_>>();
        result.shuffle(&mut rand::thread_rng());
        result
    }
}
