use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, spanned::Spanned, FnArg, GenericArgument, Ident, ItemFn, Pat,
    PathArguments, Signature, Type,
};

/// Which store the test runs against.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Backend {
    Memory,
    Mongo,
}

/// Transform an asynchronous test into a synchronous one and inject dependencies.
///
/// By default the server is backed by a fresh `crate::store::MemoryStore`; injectable
/// dependencies are [`rocket::local::asynchronous::Client`] and `MemoryStore`.
///
/// With `#[backend_test(mongodb)]` the server is backed by a `crate::store::MongoStore`
/// over a randomly named database, which is dropped regardless of how the test
/// terminates. Injectable dependencies are then `Client`, `MongoStore`,
/// [`mongodb::Database`], and `crate::model::mongodb::Coll<T>`. These tests need a
/// live database, so they are ignored unless run with `--ignored`.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    let backend = match parse_macro_input!(args as Option<Ident>) {
        None => Backend::Memory,
        Some(arg) if arg == "mongodb" => Backend::Mongo,
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected no argument or `mongodb`")
                .into_compile_error()
                .into();
        }
    };

    // Extract type information and reject invalid function signatures.
    let (test_args, collections) = match check_sig(item_fn.sig.clone(), backend) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };
    let collection_idents = collections.iter().map(|(ident, _)| ident);
    let collection_types = collections.iter().map(|(_, ty)| ty);

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    match backend {
        Backend::Memory => quote! {
            #[test]
            fn #name() {
                /// Test setup.
                async fn setup() -> (rocket::local::asynchronous::Client, crate::store::MemoryStore) {
                    log4rs_test_utils::test_logging::init_logging_once_for(["polls_backend"], None, None);
                    let store = crate::store::MemoryStore::default();
                    let rocket = crate::rocket_with_state(
                        crate::Config::example(),
                        crate::store::Stores::new(store.clone()),
                        std::sync::Arc::new(crate::clock::SystemClock),
                    );
                    let rocket_client = rocket::local::asynchronous::Client::tracked(rocket)
                        .await
                        .unwrap();
                    (rocket_client, store)
                }

                /// The test itself.
                #item_fn

                let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                    .thread_name("rocket-worker-test-thread")
                    .worker_threads(1)
                    .enable_all()
                    .build()
                    .unwrap();

                runtime.block_on(async {
                    #[allow(unused_variables)]
                    let (rocket_client, store) = setup().await;
                    #new_name(#(#test_args),*).await;
                });
            }
        },
        Backend::Mongo => quote! {
            #[test]
            #[ignore = "requires a running MongoDB instance (see POLLS_TEST_DB_URI)"]
            fn #name() {
                /// Test setup.
                async fn setup() -> (
                    rocket::local::asynchronous::Client,
                    mongodb::Database,
                    crate::store::MongoStore,
                ) {
                    log4rs_test_utils::test_logging::init_logging_once_for(["polls_backend"], None, None);
                    let db_client = crate::test_db_client().await;
                    let db = db_client.database(&crate::test_database_name());
                    let store = crate::store::MongoStore::new(&db).await.unwrap();
                    let rocket = crate::rocket_with_state(
                        crate::Config::example(),
                        crate::store::Stores::new(store.clone()),
                        std::sync::Arc::new(crate::clock::SystemClock),
                    );
                    let rocket_client = rocket::local::asynchronous::Client::tracked(rocket)
                        .await
                        .unwrap();
                    (rocket_client, db, store)
                }

                /// The test itself.
                #item_fn

                /// Test cleanup.
                async fn cleanup(db: mongodb::Database) {
                    db.drop(None).await.unwrap();
                }

                // Create an async runtime. We need a separate one for inside and
                // outside the `catch_unwind`.
                let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                    .thread_name("test-setup-cleanup")
                    .worker_threads(1)
                    .enable_all()
                    .build()
                    .unwrap();
                let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                    .thread_name("rocket-worker-test-thread")
                    .worker_threads(1)
                    .enable_all()
                    .build()
                    .unwrap();

                // Run the setup.
                let (rocket_client, db, store) = outer_runtime.block_on(setup());

                // Run the test, catching any panics.
                // Use mutexes to safely transfer `!UnwindSafe` data.
                let client_mutex = std::sync::Mutex::new(rocket_client);
                let db_mutex = std::sync::Mutex::new(db.clone());
                let store_mutex = std::sync::Mutex::new(store);
                let runtime_mutex = std::sync::Mutex::new(inner_runtime);
                let result = std::panic::catch_unwind(|| {
                    #[allow(unused_variables)]
                    let rocket_client = client_mutex.into_inner().unwrap();
                    #[allow(unused_variables)]
                    let db = db_mutex.into_inner().unwrap();
                    #[allow(unused_variables)]
                    let store = store_mutex.into_inner().unwrap();
                    let runtime = runtime_mutex.into_inner().unwrap();

                    #(
                        let #collection_idents = crate::model::mongodb::Coll::<#collection_types>::from_db(&db);
                    )*

                    runtime.block_on(#new_name(#(#test_args),*));
                });

                // Run the cleanup.
                outer_runtime.block_on(cleanup(db));

                // If the test panicked, re-raise the panic.
                if let Err(cause) = result {
                    std::panic::panic_any(cause);
                }
            }
        },
    }
    .into()
}

/// Ensure the wrapped test is async, work out the argument to pass for each parameter,
/// and reject parameters that cannot be injected for this backend.
#[allow(clippy::type_complexity)]
fn check_sig(
    sig: Signature,
    backend: Backend,
) -> Result<(Vec<TokenStream2>, Vec<(Ident, Ident)>), syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut args = vec![];
    let mut collections = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(pat_ident) = &*pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    if let Some(type_ident) = type_path.path.get_ident() {
                        if type_ident == "Client" {
                            if has_client {
                                return Err(syn::Error::new(input.span(), "Test cannot accept more than one `rocket::local::asynchronous::Client`"));
                            }
                            has_client = true;
                            args.push(quote! { rocket_client });
                            continue;
                        } else if type_ident == "MemoryStore" && backend == Backend::Memory {
                            args.push(quote! { store.clone() });
                            continue;
                        } else if type_ident == "MongoStore" && backend == Backend::Mongo {
                            args.push(quote! { store.clone() });
                            continue;
                        } else if type_ident == "Database" && backend == Backend::Mongo {
                            args.push(quote! { db.clone() });
                            continue;
                        }
                    } else if backend == Backend::Mongo {
                        // Valid as the last path segment for any type is itself
                        let possible_collection = type_path.path.segments.last().unwrap();
                        if possible_collection.ident == "Coll" {
                            if let PathArguments::AngleBracketed(generics) =
                                &possible_collection.arguments
                            {
                                if let Some(GenericArgument::Type(Type::Path(type_path))) =
                                    generics.args.first()
                                {
                                    if let Some(type_ident) = type_path.path.get_ident() {
                                        let ident = pat_ident.ident.clone();
                                        args.push(quote! { #ident.clone() });
                                        collections.push((ident, type_ident.clone()));
                                        continue;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        let expected = match backend {
            Backend::Memory => "Expected one of `client_ident: Client` or `store_ident: MemoryStore`",
            Backend::Mongo => "Expected one of `client_ident: Client`, `store_ident: MongoStore`, `db_ident: Database` or `collection_ident: Coll<T>`",
        };
        return Err(syn::Error::new(input.span(), expected));
    }

    Ok((args, collections))
}
