/*!
Procedural macros for strata-orm models.

`#[derive(Model)]` implements `strata_orm::Model` for a struct with named
fields: the column list, row mapping in both directions and table
metadata.

```ignore
#[derive(Model)]
#[model(table = "people", primary_key = "person_id", soft_deletes)]
struct Person {
    person_id: i64,
    name: String,
    #[model(column = "mail")]
    email: Option<String>,
    #[model(skip)]
    cached_score: u32,
}
```
*/

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitStr};

/// Derive `strata_orm::Model` for a struct with named fields
#[proc_macro_derive(Model, attributes(model))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    generate_model_impl(&input).unwrap_or_else(|err| err.to_compile_error().into())
}

#[derive(Default)]
struct ModelOptions {
    table: Option<String>,
    primary_key: Option<String>,
    soft_deletes: bool,
    deleted_at: Option<String>,
}

#[derive(Default)]
struct FieldOptions {
    column: Option<String>,
    skip: bool,
}

fn parse_model_options(input: &DeriveInput) -> Result<ModelOptions, syn::Error> {
    let mut options = ModelOptions::default();
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("model")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                options.table = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("primary_key") {
                options.primary_key = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("deleted_at") {
                options.deleted_at = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("soft_deletes") {
                options.soft_deletes = true;
            } else {
                return Err(meta.error("expected `table`, `primary_key`, `soft_deletes` or `deleted_at`"));
            }
            Ok(())
        })?;
    }
    Ok(options)
}

fn parse_field_options(field: &syn::Field) -> Result<FieldOptions, syn::Error> {
    let mut options = FieldOptions::default();
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("model")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("column") {
                options.column = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("skip") {
                options.skip = true;
            } else {
                return Err(meta.error("expected `column` or `skip`"));
            }
            Ok(())
        })?;
    }
    Ok(options)
}

fn generate_model_impl(input: &DeriveInput) -> Result<TokenStream, syn::Error> {
    let name = &input.ident;
    let options = parse_model_options(input)?;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Model cannot be derived for generic types",
        ));
    }

    let named = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Model can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Model can only be derived for structs",
            ))
        }
    };

    let mut columns = Vec::new();
    let mut readers = Vec::new();
    let mut writers = Vec::new();

    for field in named {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let field_options = parse_field_options(field)?;
        if field_options.skip {
            readers.push(quote! { #ident: ::core::default::Default::default() });
            continue;
        }

        let column = field_options.column.unwrap_or_else(|| ident.to_string());
        readers.push(quote! { #ident: row.get(#column) });
        writers.push(quote! {
            (#column, ::strata_orm::Value::from(::core::clone::Clone::clone(&self.#ident)))
        });
        columns.push(column);
    }

    let primary_key = options.primary_key.unwrap_or_else(|| "id".to_string());
    if !columns.contains(&primary_key) {
        return Err(syn::Error::new_spanned(
            name,
            format!("primary key `{}` is not a column of {}", primary_key, name),
        ));
    }

    let table_name = match options.table {
        Some(table) => quote! { ::core::option::Option::Some(#table) },
        None => quote! { ::core::option::Option::None },
    };
    let soft_deletes = options.soft_deletes;
    let deleted_at = options.deleted_at.unwrap_or_else(|| "deleted_at".to_string());
    let model_name = name.to_string();

    let expanded = quote! {
        impl ::strata_orm::model::Model for #name {
            const TABLE_NAME: ::core::option::Option<&'static str> = #table_name;
            const PRIMARY_KEY: &'static str = #primary_key;
            const FIELDS: &'static [&'static str] = &[#(#columns),*];
            const SOFT_DELETES: bool = #soft_deletes;
            const DELETED_AT: &'static str = #deleted_at;

            fn model_name() -> &'static str {
                #model_name
            }

            fn from_row(row: &::strata_orm::Row) -> ::strata_orm::OrmResult<Self> {
                ::core::result::Result::Ok(Self {
                    #(#readers),*
                })
            }

            fn to_values(&self) -> ::std::vec::Vec<(&'static str, ::strata_orm::Value)> {
                ::std::vec![#(#writers),*]
            }
        }
    };

    Ok(expanded.into())
}
