//! Procedural macros for the menu-agent crate
//!
//! This crate provides the `#[tool]` attribute that turns a plain Rust function into a
//! `menu_agent::tools::Tool` the completion engine can call.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, punctuated::Punctuated, Expr, ExprLit, FnArg, ItemFn, Lit, Meta, Pat,
    PatType, Token, Type, Visibility,
};

/// The `#[tool]` procedural macro
///
/// The function's doc comment becomes the tool description. Parameter descriptions are
/// read from an `Args:` section of the same doc comment, one `name: description` line per
/// parameter.
///
/// # Example
///
/// ```rust,ignore
/// use menu_agent::tool;
///
/// #[tool]
/// /// Place an order for the specified items.
/// ///
/// /// Args:
/// ///     items: Comma-separated list of items to order
/// async fn place_order(items: String) -> Result<String, String> {
///     Ok(format!("ORDER_PLACED: [{}]", items))
/// }
/// ```
///
/// This generates:
/// - A `PlaceOrderTool` unit struct implementing `Tool`
/// - A JSON schema built from the parameter types
/// - A `place_order()` constructor returning `Box<dyn Tool>`
/// - The original body, renamed to `place_order_impl`
#[proc_macro_attribute]
pub fn tool(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = parse_macro_input!(args with Punctuated::<Meta, Token![,]>::parse_terminated);
    let input_fn = parse_macro_input!(input as ItemFn);

    match generate_tool_impl(args, input_fn) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn generate_tool_impl(
    args: Punctuated<Meta, Token![,]>,
    input_fn: ItemFn,
) -> syn::Result<TokenStream2> {
    let tool_config = parse_tool_args(&args)?;
    let fn_info = parse_function(&input_fn)?;

    let renamed_fn = generate_renamed_function(&input_fn);
    let tool_struct = generate_tool_struct(&fn_info);
    let tool_impl = generate_tool_trait_impl(&fn_info, &tool_config)?;
    let function_constructor = generate_function_constructor(&fn_info);

    Ok(quote! {
        #renamed_fn

        #tool_struct

        #tool_impl

        #function_constructor
    })
}

#[derive(Debug, Default)]
struct ToolConfig {
    name: Option<String>,
    description: Option<String>,
}

#[derive(Debug)]
struct FunctionInfo {
    name: String,
    vis: Visibility,
    is_async: bool,
    inputs: Vec<FunctionInput>,
    docs: ToolDocs,
}

#[derive(Debug)]
struct FunctionInput {
    name: String,
    ty: Type,
    is_optional: bool,
}

/// Doc comment split into the summary and the `Args:` entries
#[derive(Debug, Default, PartialEq)]
struct ToolDocs {
    summary: Option<String>,
    params: Vec<(String, String)>,
}

impl ToolDocs {
    fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, description)| description.as_str())
    }
}

fn parse_tool_args(args: &Punctuated<Meta, Token![,]>) -> syn::Result<ToolConfig> {
    let mut config = ToolConfig::default();

    for arg in args {
        match arg {
            Meta::NameValue(nv) if nv.path.is_ident("name") => {
                config.name = Some(string_literal(&nv.value)?);
            }
            Meta::NameValue(nv) if nv.path.is_ident("description") => {
                config.description = Some(string_literal(&nv.value)?);
            }
            _ => {
                return Err(syn::Error::new_spanned(
                    arg,
                    "Unsupported tool attribute. Use `name` or `description`",
                ));
            }
        }
    }

    Ok(config)
}

fn string_literal(expr: &Expr) -> syn::Result<String> {
    match expr {
        Expr::Lit(ExprLit {
            lit: Lit::Str(lit_str),
            ..
        }) => Ok(lit_str.value()),
        other => Err(syn::Error::new_spanned(other, "Expected a string literal")),
    }
}

fn parse_function(input_fn: &ItemFn) -> syn::Result<FunctionInfo> {
    let mut inputs = Vec::new();
    for input in &input_fn.sig.inputs {
        match input {
            FnArg::Typed(PatType { pat, ty, .. }) => {
                let Pat::Ident(pat_ident) = pat.as_ref() else {
                    return Err(syn::Error::new_spanned(
                        pat,
                        "Tool parameters must be plain identifiers",
                    ));
                };
                inputs.push(FunctionInput {
                    name: pat_ident.ident.to_string(),
                    ty: (**ty).clone(),
                    is_optional: is_option_type(ty),
                });
            }
            FnArg::Receiver(_) => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Tool functions cannot have self parameters",
                ));
            }
        }
    }

    Ok(FunctionInfo {
        name: input_fn.sig.ident.to_string(),
        vis: input_fn.vis.clone(),
        is_async: input_fn.sig.asyncness.is_some(),
        inputs,
        docs: parse_doc_lines(&doc_lines(&input_fn.attrs)),
    })
}

fn doc_lines(attrs: &[syn::Attribute]) -> Vec<String> {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(nv) => string_literal(&nv.value).ok(),
            _ => None,
        })
        .collect()
}

/// Split doc lines into a one-paragraph summary and `Args:` parameter entries.
/// A `Returns:` (or any other `Section:`) header ends the args section.
fn parse_doc_lines(lines: &[String]) -> ToolDocs {
    let mut summary = Vec::new();
    let mut params: Vec<(String, String)> = Vec::new();
    let mut in_args = false;
    let mut in_other_section = false;

    for raw in lines {
        let line = raw.trim();
        if line == "Args:" || line == "Arguments:" {
            in_args = true;
            in_other_section = false;
            continue;
        }
        if line.ends_with(':') && !line.contains(' ') {
            in_args = false;
            in_other_section = true;
            continue;
        }
        if line.is_empty() {
            continue;
        }

        if in_args {
            match line.split_once(':') {
                Some((name, description)) if !name.contains(' ') => {
                    params.push((name.trim().to_string(), description.trim().to_string()));
                }
                // continuation of the previous parameter description
                _ => {
                    if let Some((_, description)) = params.last_mut() {
                        description.push(' ');
                        description.push_str(line);
                    }
                }
            }
        } else if !in_other_section {
            summary.push(line.to_string());
        }
    }

    ToolDocs {
        summary: if summary.is_empty() {
            None
        } else {
            Some(summary.join(" "))
        },
        params,
    }
}

fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Option";
        }
    }
    false
}

fn generate_renamed_function(input_fn: &ItemFn) -> TokenStream2 {
    let mut renamed_fn = input_fn.clone();
    renamed_fn.sig.ident = format_ident!("{}_impl", input_fn.sig.ident);
    // the doc comment now lives on the tool; keep other attributes
    renamed_fn.attrs.retain(|attr| !attr.path().is_ident("doc"));

    quote! {
        #[allow(dead_code)]
        #renamed_fn
    }
}

fn generate_function_constructor(fn_info: &FunctionInfo) -> TokenStream2 {
    let fn_name = format_ident!("{}", fn_info.name);
    let struct_name = struct_name(&fn_info.name);
    let vis = &fn_info.vis;

    quote! {
        /// Create a boxed instance of this tool for a `ToolRegistry`
        #vis fn #fn_name() -> Box<dyn menu_agent::tools::Tool> {
            Box::new(#struct_name)
        }
    }
}

fn generate_tool_struct(fn_info: &FunctionInfo) -> TokenStream2 {
    let struct_name = struct_name(&fn_info.name);
    let vis = &fn_info.vis;

    quote! {
        #[derive(Debug, Clone, Copy, Default)]
        #vis struct #struct_name;
    }
}

fn generate_tool_trait_impl(
    fn_info: &FunctionInfo,
    tool_config: &ToolConfig,
) -> syn::Result<TokenStream2> {
    let struct_name = struct_name(&fn_info.name);
    let fn_impl_name = format_ident!("{}_impl", fn_info.name);

    let tool_name = tool_config.name.as_ref().unwrap_or(&fn_info.name);
    let tool_description = tool_config
        .description
        .as_deref()
        .or(fn_info.docs.summary.as_deref())
        .unwrap_or("Auto-generated tool");

    let schema = generate_input_schema(&fn_info.inputs, &fn_info.docs)?;
    let param_extractions = generate_parameter_extraction(&fn_info.inputs);

    let param_names: Vec<_> = fn_info
        .inputs
        .iter()
        .map(|input| format_ident!("{}", input.name))
        .collect();

    let fn_call = if fn_info.is_async {
        quote! { #fn_impl_name(#(#param_names),*).await }
    } else {
        quote! { #fn_impl_name(#(#param_names),*) }
    };

    Ok(quote! {
        #[async_trait::async_trait]
        impl menu_agent::tools::Tool for #struct_name {
            fn name(&self) -> &str {
                #tool_name
            }

            fn description(&self) -> &str {
                #tool_description
            }

            fn parameters_schema(&self) -> serde_json::Value {
                #schema
            }

            async fn execute(
                &self,
                parameters: Option<serde_json::Value>,
            ) -> Result<menu_agent::tools::ToolResult, menu_agent::tools::ToolError> {
                let input = parameters.unwrap_or_else(|| serde_json::json!({}));
                let input_obj = input.as_object()
                    .ok_or_else(|| menu_agent::tools::ToolError::InvalidParameters {
                        message: "Tool input must be a JSON object".to_string()
                    })?;

                #(#param_extractions)*

                match #fn_call {
                    Ok(value) => {
                        let json_value = serde_json::to_value(value)
                            .map_err(|e| menu_agent::tools::ToolError::ExecutionFailed {
                                message: format!("Failed to serialize result: {}", e)
                            })?;
                        Ok(menu_agent::tools::ToolResult::success(json_value))
                    }
                    Err(e) => Ok(menu_agent::tools::ToolResult::error(e.to_string())),
                }
            }
        }
    })
}

fn generate_input_schema(inputs: &[FunctionInput], docs: &ToolDocs) -> syn::Result<TokenStream2> {
    let mut properties = Vec::new();
    let mut required = Vec::new();

    for input in inputs {
        let name = &input.name;
        let description = docs.param(name).unwrap_or("Parameter");
        let json_type = rust_type_to_json_schema(&input.ty)?;

        properties.push(quote! {
            #name: serde_json::json!({
                "type": #json_type,
                "description": #description
            })
        });

        if !input.is_optional {
            required.push(name);
        }
    }

    Ok(quote! {
        serde_json::json!({
            "type": "object",
            "properties": {
                #(#properties,)*
            },
            "required": [#(#required,)*]
        })
    })
}

fn rust_type_to_json_schema(ty: &Type) -> syn::Result<String> {
    let Type::Path(type_path) = ty else {
        return Ok("string".to_string());
    };
    let Some(segment) = type_path.path.segments.last() else {
        return Ok("string".to_string());
    };

    let json_type = match segment.ident.to_string().as_str() {
        "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
        | "u128" | "usize" => "integer",
        "f32" | "f64" => "number",
        "bool" => "boolean",
        "Vec" => "array",
        "HashMap" | "BTreeMap" => "object",
        "Option" => {
            if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                if let Some(syn::GenericArgument::Type(inner_ty)) = args.args.first() {
                    return rust_type_to_json_schema(inner_ty);
                }
            }
            "string"
        }
        _ => "string",
    };
    Ok(json_type.to_string())
}

fn generate_parameter_extraction(inputs: &[FunctionInput]) -> Vec<TokenStream2> {
    inputs
        .iter()
        .map(|input| {
            let param_name = format_ident!("{}", input.name);
            let param_str = &input.name;

            if input.is_optional {
                quote! {
                    let #param_name = input_obj.get(#param_str)
                        .and_then(|v| serde_json::from_value(v.clone()).ok());
                }
            } else {
                quote! {
                    let #param_name = input_obj.get(#param_str)
                        .ok_or_else(|| menu_agent::tools::ToolError::InvalidParameters {
                            message: format!("Missing required parameter: {}", #param_str)
                        })?;
                    let #param_name = serde_json::from_value(#param_name.clone())
                        .map_err(|e| menu_agent::tools::ToolError::InvalidParameters {
                            message: format!("Invalid parameter {}: {}", #param_str, e)
                        })?;
                }
            }
        })
        .collect()
}

fn struct_name(fn_name: &str) -> proc_macro2::Ident {
    format_ident!("{}Tool", snake_to_pascal(fn_name))
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

fn snake_to_pascal(s: &str) -> String {
    s.split('_').map(capitalize_first).collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_snake_to_pascal() {
        assert_eq!(snake_to_pascal("place_order"), "PlaceOrder");
        assert_eq!(snake_to_pascal("lookup_price"), "LookupPrice");
        assert_eq!(snake_to_pascal("menu"), "Menu");
        assert_eq!(snake_to_pascal(""), "");
    }

    #[test]
    fn test_rust_type_to_json_schema() {
        let string_type: Type = parse_quote!(String);
        assert_eq!(rust_type_to_json_schema(&string_type).unwrap(), "string");

        let int_type: Type = parse_quote!(usize);
        assert_eq!(rust_type_to_json_schema(&int_type).unwrap(), "integer");

        let float_type: Type = parse_quote!(f64);
        assert_eq!(rust_type_to_json_schema(&float_type).unwrap(), "number");

        let optional: Type = parse_quote!(Option<bool>);
        assert_eq!(rust_type_to_json_schema(&optional).unwrap(), "boolean");
    }

    #[test]
    fn test_is_option_type() {
        let option_type: Type = parse_quote!(Option<String>);
        assert!(is_option_type(&option_type));

        let string_type: Type = parse_quote!(String);
        assert!(!is_option_type(&string_type));
    }

    #[test]
    fn test_parse_tool_args() {
        let args: Punctuated<Meta, Token![,]> = Punctuated::new();
        let config = parse_tool_args(&args).unwrap();
        assert!(config.name.is_none());
        assert!(config.description.is_none());

        let args: Punctuated<Meta, Token![,]> = parse_quote!(name = "order", description = "Order");
        let config = parse_tool_args(&args).unwrap();
        assert_eq!(config.name.as_deref(), Some("order"));
        assert_eq!(config.description.as_deref(), Some("Order"));

        let args: Punctuated<Meta, Token![,]> = parse_quote!(unknown = "x");
        assert!(parse_tool_args(&args).is_err());
    }

    #[test]
    fn test_doc_summary_and_args() {
        let docs = parse_doc_lines(&lines(&[
            " Place an order for the specified items.",
            " Use this tool when the user wants to order items from the menu.",
            "",
            " Args:",
            "     items: Comma-separated list of items to order",
            "         (e.g., \"Big Mac, Fries\")",
            "",
            " Returns:",
            "     Order confirmation message",
        ]));

        assert_eq!(
            docs.summary.as_deref(),
            Some("Place an order for the specified items. Use this tool when the user wants to order items from the menu.")
        );
        assert_eq!(
            docs.param("items"),
            Some("Comma-separated list of items to order (e.g., \"Big Mac, Fries\")")
        );
        assert_eq!(docs.param("missing"), None);
    }

    #[test]
    fn test_doc_without_sections() {
        let docs = parse_doc_lines(&lines(&[" Search the menu."]));
        assert_eq!(docs.summary.as_deref(), Some("Search the menu."));
        assert!(docs.params.is_empty());

        assert_eq!(parse_doc_lines(&[]), ToolDocs::default());
    }
}
