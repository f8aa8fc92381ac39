use env_logger::{Builder, Env};

/// ロガーを初期化する。`RUST_LOG` があればそちらを優先
///
/// 二回目以降の呼び出しは何もしない。
pub fn init(level: &str) {
    let _ = Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init("debug");
        init("info");
        log::info!("logger ready");
    }
}
