mod live;
#[cfg(unix)]
mod loopback;
mod test_utils;
