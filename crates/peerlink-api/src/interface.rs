//! Capability interface generator.
//!
//! `capability_interface!` takes one method list and generates, for that
//! interface:
//! - the async trait itself,
//! - a proxy struct holding one optional handler per method (`None` marks a
//!   method without implementation, which answers `Error::NotSupported`),
//!   with `from_impl`, `wrap`, `merge` and `supported`,
//! - a stub type answering `Error::NotSupported` everywhere,
//! - the method table (`METHODS`) and JSON-RPC dispatch for the proxy.
//!
//! Each method line reads `[Perm] fn rust_name = "WireName" (args) -> Ret;`.

macro_rules! capability_interface {
	(
		$(#[$meta:meta])*
		pub interface $name:ident {
			proxy: $proxy:ident,
			stub: $stub:ident,
			methods {
				$(
					$(#[$mmeta:meta])*
					[$perm:ident] fn $method:ident = $wire:literal ( $( $arg:ident : $argty:ty ),* ) -> $ret:ty;
				)*
			}
		}
	) => {
		$(#[$meta])*
		#[async_trait::async_trait]
		pub trait $name: Send + Sync {
			$(
				$(#[$mmeta])*
				async fn $method(&self, ctx: $crate::CallCtx $(, $arg: $argty)*) -> $crate::PlResult<$ret>;
			)*
		}

		#[doc = concat!("Handler table implementing [`", stringify!($name), "`]. Methods without a handler answer `Error::NotSupported`.")]
		#[derive(Clone, Default)]
		pub struct $proxy {
			$( pub $method: Option<$crate::Handler<( $($argty,)* ), $ret>>, )*
		}

		impl $proxy {
			pub const METHODS: &'static [$crate::MethodDesc] = &[
				$( $crate::MethodDesc { name: $wire, perm: $crate::Permission::$perm }, )*
			];

			/// Table with no handlers at all
			pub fn stub() -> Self {
				Self::default()
			}

			/// Forward every method to a complete implementation
			pub fn from_impl<T: $name + ?Sized + 'static>(inner: ::std::sync::Arc<T>) -> Self {
				Self {
					$(
						$method: Some({
							let inner = ::std::sync::Arc::clone(&inner);
							::std::sync::Arc::new(
								move |ctx: $crate::CallCtx, ($($arg,)*): ($($argty,)*)| -> $crate::CallFuture<$ret> {
									let inner = ::std::sync::Arc::clone(&inner);
									Box::pin(async move { inner.$method(ctx $(, $arg)*).await })
								},
							)
						}),
					)*
				}
			}

			/// Wire names of the methods that have a handler
			pub fn supported(&self) -> Vec<&'static str> {
				let mut out = Vec::new();
				$( if self.$method.is_some() { out.push($wire); } )*
				out
			}

			/// Fill the methods missing here from `fallback`
			pub fn merge(self, fallback: Self) -> Self {
				Self { $( $method: self.$method.or(fallback.$method), )* }
			}

			/// Route every method, present or not, through `around`
			pub fn wrap(&self, around: ::std::sync::Arc<dyn $crate::Around>) -> Self {
				Self {
					$(
						$method: Some($crate::around::wrap_handler(
							$wire,
							self.$method.clone(),
							::std::sync::Arc::clone(&around),
						)),
					)*
				}
			}
		}

		#[async_trait::async_trait]
		impl $name for $proxy {
			$(
				async fn $method(&self, ctx: $crate::CallCtx $(, $arg: $argty)*) -> $crate::PlResult<$ret> {
					match &self.$method {
						Some(handler) => handler(ctx, ($($arg,)*)).await,
						None => Err($crate::Error::NotSupported),
					}
				}
			)*
		}

		#[doc = concat!("[`", stringify!($name), "`] implementation answering `Error::NotSupported` for every method.")]
		#[derive(Debug, Clone, Copy, Default)]
		pub struct $stub;

		#[async_trait::async_trait]
		impl $name for $stub {
			$(
				#[allow(unused_variables)]
				async fn $method(&self, ctx: $crate::CallCtx $(, $arg: $argty)*) -> $crate::PlResult<$ret> {
					Err($crate::Error::NotSupported)
				}
			)*
		}

		impl $crate::RpcDispatch for $proxy {
			fn methods(&self) -> Vec<$crate::MethodDesc> {
				Self::METHODS.to_vec()
			}

			fn call(
				&self,
				method: &str,
				ctx: $crate::CallCtx,
				params: Vec<::serde_json::Value>,
			) -> $crate::CallFuture<::serde_json::Value> {
				match method {
					$(
						$wire => {
							let Some(handler) = self.$method.clone() else {
								return Box::pin(async { Err($crate::Error::NotSupported) });
							};
							Box::pin(async move {
								let mut params = params.into_iter();
								$(
									let $arg: $argty =
										$crate::dispatch::take_param(&mut params, $wire, stringify!($arg))?;
								)*
								if params.next().is_some() {
									return Err($crate::Error::InvalidParams(format!(
										"{}: too many arguments",
										$wire
									)));
								}
								let result = handler(ctx, ($($arg,)*)).await?;
								Ok(::serde_json::to_value(result)?)
							})
						}
					)*
					other => {
						let other = other.to_string();
						Box::pin(async move { Err($crate::Error::MethodNotFound(other)) })
					}
				}
			}
		}
	};
}

pub(crate) use capability_interface;

// vim: ts=4
