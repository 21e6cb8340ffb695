use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, ItemFn};

/// Marks a function as an rxengine test.
///
/// Every test gets `env_logger` installed in test mode and a fresh
/// thread-local `rxengine::config`, so a handler installed by one test never
/// leaks into the next one running on the same thread. `async fn` tests are
/// driven to completion on `futures::executor::block_on`.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
  let input = parse_macro_input!(item as ItemFn);

  let raw_args = proc_macro2::TokenStream::from(attr);
  if !raw_args.is_empty() {
    return TokenStream::from(
      syn::Error::new(
        raw_args.span(),
        "rxengine_macro::test does not take arguments. Use #[rxengine_macro::test] for sync \
         and async tests alike.",
      )
      .to_compile_error(),
    );
  }

  let ItemFn { attrs, vis, mut sig, block } = input;
  let is_async = sig.asyncness.take().is_some();

  let body = if is_async {
    quote! { ::futures::executor::block_on(async move #block) }
  } else {
    quote! { #block }
  };

  let expanded = quote! {
      #[test]
      #(#attrs)*
      #vis #sig {
        let _ = ::env_logger::builder().is_test(true).try_init();
        ::rxengine::config::reset();
        #body
      }
  };

  TokenStream::from(expanded)
}
