#[macro_export]
macro_rules! declare_kv_plugin {
    ($name:expr, $ty:ty) => {
        #[ctor::ctor]
        fn __register_kv_plugin() {
            use std::sync::Arc;
            use $crate::cache::register::register_kv_plugin;

            register_kv_plugin(
                $name,
                Arc::new(|config: $crate::config::CacheConfig| {
                    Box::pin(async move {
                        let store = <$ty>::new(&config).await?;
                        Ok(Arc::new(store) as Arc<dyn $crate::cache::traits::KvStore>)
                    })
                }),
            );
        }
    };
}
